#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} API request failed (status {status})")]
    Status { provider: &'static str, status: u16 },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("missing API key for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let cases = [
            (LlmError::RateLimited, "rate limited"),
            (
                LlmError::Status {
                    provider: "openai-compatible",
                    status: 503,
                },
                "openai-compatible API request failed (status 503)",
            ),
            (
                LlmError::SseParse("bad chunk".into()),
                "SSE parse error: bad chunk",
            ),
            (
                LlmError::MissingApiKey {
                    provider: "openai-compatible",
                },
                "missing API key for openai-compatible",
            ),
            (LlmError::Other("boom".into()), "boom"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }
}
