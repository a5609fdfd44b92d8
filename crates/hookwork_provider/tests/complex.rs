//! Integration tests for the message-driven complex provider.

use core::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use hookwork_core::{ResultGatherer, ResultSet, async_hook_fn, hook_fn};
use hookwork_message::{MessageError, MessageFailure, MessageSystem};
use hookwork_provider::{
    Binding, CancellationToken, ComplexProvider, MessageHandler, Passthrough, ProcessingError,
    Provider, ProviderError, ProviderKind, ProviderState, postprocess_fn, preprocess_fn,
};

/// Renders each hook outcome as text; rejects zero and panics on 13.
struct Verdicts;

#[async_trait]
impl MessageHandler for Verdicts {
    type Payload = u64;
    type Item = u64;
    type Output = String;
    type Reply = Vec<String>;

    async fn preprocess_data(&self, payload: u64) -> Result<u64, ProcessingError> {
        match payload {
            0 => Err(ProcessingError::new("zero is not accepted")),
            13 => panic!("unlucky number"),
            n => Ok(n),
        }
    }

    async fn postprocess_result(
        &self,
        results: ResultSet<String>,
    ) -> Result<Vec<String>, ProcessingError> {
        Ok(results
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|failure| failure.to_string()))
            .collect())
    }
}

fn divisibility_provider(binding: Binding) -> ComplexProvider<Verdicts> {
    let mut provider = ComplexProvider::new("divisibility", Verdicts).with_binding(binding);
    for d in [2_u64, 3] {
        provider.add_hook(hook_fn(format!("div{d}"), move |n: &u64| {
            let verdict = if n % d == 0 { "yes" } else { "no" };
            Ok(format!("divisible by {d}: {verdict}"))
        }));
    }
    provider
}

fn expected(n: u64) -> Vec<String> {
    [2_u64, 3]
        .iter()
        .map(|d| {
            let verdict = if n % d == 0 { "yes" } else { "no" };
            format!("divisible by {d}: {verdict}")
        })
        .collect()
}

#[tokio::test]
async fn foreign_thread_caller_gets_its_answer() {
    let provider = divisibility_provider(Binding::Loop);
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();
    assert_eq!(handle.kind(), ProviderKind::Complex);

    let answer = tokio::task::spawn_blocking(move || {
        messages.send_wait_answer_blocking(4, Some(Duration::from_secs(5)))
    })
    .await
    .unwrap();

    assert_eq!(
        answer,
        Ok(vec![
            "divisible by 2: yes".to_string(),
            "divisible by 3: no".to_string(),
        ])
    );

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn messages_sent_before_start_are_processed() {
    let provider = divisibility_provider(Binding::Loop);
    let messages = provider.message_system();
    let ids: Vec<_> = (1..=3_u64)
        .map(|n| messages.send_to_provider(n).unwrap())
        .collect();
    assert_eq!(messages.pending_count(), 3);

    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    for (n, id) in (1..=3_u64).zip(ids) {
        assert_eq!(messages.wait_for(id).await, Ok(expected(n)));
    }

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn stage_failures_fail_only_their_message() {
    let provider = divisibility_provider(Binding::Loop);
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    let rejected = messages.send_wait_answer(0).await.unwrap_err();
    assert!(matches!(
        rejected,
        MessageError::Failed {
            failure: MessageFailure::Processing(ref reason),
            ..
        } if reason == "zero is not accepted"
    ));

    let panicked = messages.send_wait_answer(13).await.unwrap_err();
    let MessageError::Failed {
        failure: MessageFailure::Processing(reason),
        ..
    } = panicked
    else {
        panic!("expected a processing failure, got {panicked:?}");
    };
    assert!(reason.contains("unlucky number"), "{reason}");

    // The provider keeps serving.
    assert_eq!(messages.send_wait_answer(9).await, Ok(expected(9)));
    assert_eq!(handle.state(), ProviderState::Running);

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn hook_failures_reach_postprocess() {
    let provider = ComplexProvider::new("picky", Verdicts)
        .with_hook(hook_fn("ok", |n: &u64| Ok(n.to_string())))
        .with_hook(hook_fn("odd-only", |n: &u64| {
            if n % 2 == 0 {
                Err("even input".into())
            } else {
                Ok("odd".to_string())
            }
        }));
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    let reply = messages.send_wait_answer(8).await.unwrap();
    assert_eq!(reply[0], "8");
    assert_eq!(reply[1], "hook 'odd-only' failed: even input");

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn shutdown_fails_in_flight_and_queued_messages() {
    let provider = ComplexProvider::new("slow", Passthrough::<u64, u64>::new())
        .with_gatherer(ResultGatherer::new().with_hook_timeout(Duration::from_millis(300)))
        .with_hook(async_hook_fn("sleepy", |n: u64| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(n)
        }));
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    let waiters: Vec<_> = (0..3_u64)
        .map(|n| {
            let messages = messages.clone();
            tokio::spawn(async move { messages.send_wait_answer(n).await })
        })
        .collect();
    while messages.pending_count() < 3 {
        tokio::task::yield_now().await;
    }

    let started = Instant::now();
    stop.cancel();
    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not released by shutdown")
            .unwrap();
        assert!(result.unwrap_err().is_shutdown());
    }
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(messages.send_to_provider(7), Err(MessageError::Stopped));

    // The in-flight fan-out ends at the hook deadline and its result is dropped.
    tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("provider did not stop")
        .unwrap();
    assert_eq!(messages.pending_count(), 0);
}

#[tokio::test]
async fn thread_bound_provider_serves_async_callers() {
    let provider = divisibility_provider(Binding::Thread);
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    let answers = futures::future::join_all((1..=6_u64).map(|n| {
        let messages = messages.clone();
        async move { (n, messages.send_wait_answer(n).await) }
    }))
    .await;
    for (n, answer) in answers {
        assert_eq!(answer, Ok(expected(n)));
    }

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn run_serves_until_cancelled() {
    let provider = ComplexProvider::new("inline", Passthrough::<u64, bool>::new())
        .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
    let messages = provider.message_system();
    let stop = CancellationToken::new();

    let caller = {
        let stop = stop.clone();
        async move {
            let reply = messages.send_wait_answer(10).await.unwrap();
            stop.cancel();
            reply
        }
    };
    let (served, reply) = tokio::join!(provider.run(stop), caller);

    served.unwrap();
    assert_eq!(reply.into_outcomes(), vec![Ok(true)]);
}

#[tokio::test]
async fn a_message_system_feeds_one_provider_only() {
    let provider = divisibility_provider(Binding::Loop);
    let messages: MessageSystem<u64, Vec<String>> = provider.message_system();
    let _stolen = messages.inbox().unwrap();

    let error = Box::new(provider)
        .launch(CancellationToken::new())
        .unwrap_err();
    assert!(matches!(
        error,
        ProviderError::Messages {
            source: MessageError::InboxTaken,
            ..
        }
    ));
}

#[tokio::test]
async fn dropping_an_unserved_provider_releases_its_callers() {
    let provider = divisibility_provider(Binding::Loop);
    let messages = provider.message_system();
    let id = messages.send_to_provider(6).unwrap();
    let waiter = {
        let messages = messages.clone();
        tokio::spawn(async move { messages.wait_for(id).await })
    };
    tokio::task::yield_now().await;

    drop(provider);

    let result = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter hung on a dropped provider")
        .unwrap();
    assert!(result.unwrap_err().is_shutdown());
    assert!(messages.is_stopped());
}

#[tokio::test]
async fn failed_launch_releases_buffered_callers() {
    let provider = divisibility_provider(Binding::Loop);
    let messages = provider.message_system();
    let id = messages.send_to_provider(6).unwrap();
    let stolen = messages.inbox().unwrap();

    assert!(Box::new(provider).launch(CancellationToken::new()).is_err());

    assert!(messages.wait_for(id).await.unwrap_err().is_shutdown());
    drop(stolen);
}

#[test]
fn reconfiguring_messages_stops_the_replaced_system() {
    let provider = divisibility_provider(Binding::Loop);
    let early = provider.message_system();
    let id = early.send_to_provider(4).unwrap();

    let provider = provider.with_message_config(hookwork_message::MessageSystemConfig {
        retention: Some(Duration::from_secs(60)),
    });

    assert!(early.wait_for_blocking(id, None).unwrap_err().is_shutdown());
    assert!(!provider.message_system().is_stopped());
}

#[tokio::test]
async fn preprocess_only_handler_replies_with_the_result_set() {
    let parse = preprocess_fn::<String, u64, bool, _>(|text| {
        text.trim()
            .parse::<u64>()
            .map_err(|e| ProcessingError::new(e.to_string()))
    });
    let provider = ComplexProvider::new("parser", parse)
        .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)))
        .with_hook(hook_fn("small", |n: &u64| Ok(*n < 10)));
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    let reply = messages.send_wait_answer(" 12 ".to_string()).await.unwrap();
    assert_eq!(reply.into_outcomes(), vec![Ok(true), Ok(false)]);

    let rejected = messages.send_wait_answer("twelve".to_string()).await.unwrap_err();
    assert!(matches!(
        rejected,
        MessageError::Failed {
            failure: MessageFailure::Processing(_),
            ..
        }
    ));

    stop.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn postprocess_only_handler_sees_the_raw_payload() {
    let tally = postprocess_fn::<u64, bool, usize, _>(|results| {
        Ok(results.iter().filter(|outcome| matches!(outcome, Ok(true))).count())
    });
    let provider = ComplexProvider::new("tally", tally)
        .with_hook(hook_fn("div2", |n: &u64| Ok(n % 2 == 0)))
        .with_hook(hook_fn("div3", |n: &u64| Ok(n % 3 == 0)))
        .with_hook(hook_fn("div5", |n: &u64| Ok(n % 5 == 0)));
    let messages = provider.message_system();
    let stop = CancellationToken::new();
    let handle = Box::new(provider).launch(stop.clone()).unwrap();

    assert_eq!(messages.send_wait_answer(30).await, Ok(3));
    assert_eq!(messages.send_wait_answer(9).await, Ok(1));
    assert_eq!(messages.send_wait_answer(7).await, Ok(0));

    stop.cancel();
    handle.join().await.unwrap();
}
