//! Session collaborator boundary: an immutable bearer-token to user-id map
//! provisioned at server start. Token issuance lives outside this service.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct SessionMap {
    tokens: Arc<HashMap<String, String>>,
}

impl SessionMap {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
