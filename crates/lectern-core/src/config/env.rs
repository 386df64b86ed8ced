use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse::<u32>() {
                self.llm.max_tokens = Some(n);
            } else {
                tracing::warn!("ignoring invalid LECTERN_LLM_MAX_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("LECTERN_SERVER_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("LECTERN_SERVER_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            } else {
                tracing::warn!("ignoring invalid LECTERN_SERVER_PORT value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_SERVER_MAX_UPLOAD_BYTES")
            && let Ok(bytes) = v.parse::<usize>()
        {
            self.server.max_upload_bytes = bytes;
        }
        if let Ok(v) = std::env::var("LECTERN_UPLOAD_DIR") {
            self.server.upload_dir = v;
        }
        if let Ok(v) = std::env::var("LECTERN_SESSION_TTL")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.session.ttl_secs = secs;
        }
        if let Ok(v) = std::env::var("LECTERN_CONTEXT_MAX_CHARS")
            && let Ok(chars) = v.parse::<usize>()
        {
            self.context.max_context_chars = Some(chars);
        }
        if let Ok(v) = std::env::var("LECTERN_LOG_FILE") {
            self.logging.file = if v.is_empty() { None } else { Some(v) };
        }
    }
}
