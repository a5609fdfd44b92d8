use async_trait::async_trait;
use hookwork_core::ResultSet;
use hookwork_provider::{MessageHandler, MessagesOf, ProcessingError};

/// Accepts numbers as text and replies with one line per divisor.
///
/// Unparsable text fails the message at preprocessing; a failing hook shows
/// up as its failure text at that hook's position.
#[derive(Debug, Default)]
pub struct TextualChecker;

/// Handle for submitting numbers to the checker.
pub type CheckerMessages = MessagesOf<TextualChecker>;

#[async_trait]
impl MessageHandler for TextualChecker {
    type Payload = String;
    type Item = u64;
    type Output = String;
    type Reply = Vec<String>;

    async fn preprocess_data(&self, payload: String) -> Result<u64, ProcessingError> {
        payload
            .trim()
            .parse()
            .map_err(|error| ProcessingError::new(format!("'{payload}' is not a number: {error}")))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_trimmed_numbers() {
        assert_eq!(TextualChecker.preprocess_data(" 12\n".into()).await, Ok(12));
    }

    #[tokio::test]
    async fn rejects_text() {
        let error = TextualChecker
            .preprocess_data("twelve".into())
            .await
            .unwrap_err();
        assert!(error.message().contains("'twelve' is not a number"));
    }
}
