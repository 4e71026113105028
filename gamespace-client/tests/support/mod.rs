#![allow(dead_code)]

use std::sync::Arc;

use gamespace_client::{Credential, GameSpaceClient, MemoryCredentialStore};
use gamespace_core::HttpTransport;
use gamespace_test_utils::fixtures::{self, REFRESH_TOKEN, TEST_USERNAME};
use gamespace_test_utils::{HttpMethod, ScriptedTransport};

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryCredentialStore>,
    pub client: GameSpaceClient,
}

pub fn harness() -> Harness {
    harness_with_store(MemoryCredentialStore::new())
}

pub fn harness_with_store(store: MemoryCredentialStore) -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(store);
    let client = GameSpaceClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        store.clone(),
    );
    Harness {
        transport,
        store,
        client,
    }
}

/// A harness whose session already holds `access`.
pub async fn logged_in(access: &str) -> Harness {
    let harness = harness();
    harness.transport.respond(
        HttpMethod::Post,
        "/auth/login/",
        200,
        fixtures::envelope(fixtures::login_json(
            access,
            REFRESH_TOKEN,
            Some(fixtures::test_user_json()),
        )),
    );
    harness
        .client
        .login(TEST_USERNAME, "hunter22")
        .await
        .expect("scripted login failed");
    harness
}

pub fn stored(access: &str) -> MemoryCredentialStore {
    MemoryCredentialStore::with_credential(Credential::new(access, Some(REFRESH_TOKEN.to_string())))
}
