//! Mock fragment server: `GET /fragment?id=<key>` answered from a word list.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Mutex;

use puzzle_core::Fragment;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Starts a mock fragment server, or returns `None` on hosts that cannot
/// bind a loopback socket.
pub async fn start_fragment_server() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("loopback socket unavailable, skipping mock fragment server test");
        return None;
    }
    Some(MockServer::start().await)
}

/// Answers fragment requests from an in-memory table.
///
/// Word `i` of the table is served at key `i + key_offset` with position `i`.
pub struct FragmentResponder {
    fragments: HashMap<i64, Fragment>,
    absent_first: Mutex<HashMap<i64, u32>>,
    malformed: Vec<i64>,
}

impl FragmentResponder {
    pub fn new(words: &[&str], key_offset: i64) -> Self {
        let fragments = words
            .iter()
            .zip(0..)
            .map(|(word, position)| {
                let key = position + key_offset;
                (key, Fragment::new(key, position, *word))
            })
            .collect();
        Self {
            fragments,
            absent_first: Mutex::new(HashMap::new()),
            malformed: Vec::new(),
        }
    }

    /// Makes `key` answer 404 for its first `times` requests.
    pub fn absent_first(self, key: i64, times: u32) -> Self {
        self.absent_first.lock().unwrap().insert(key, times);
        self
    }

    /// Makes `key` answer 200 with a body that is not a fragment.
    pub fn malformed(mut self, key: i64) -> Self {
        self.malformed.push(key);
        self
    }

    pub async fn mount(self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/fragment"))
            .respond_with(self)
            .mount(server)
            .await;
    }
}

impl Respond for FragmentResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(key) = request
            .url
            .query_pairs()
            .find(|(name, _)| name == "id")
            .and_then(|(_, value)| value.parse::<i64>().ok())
        else {
            return ResponseTemplate::new(400);
        };

        if let Some(remaining) = self.absent_first.lock().unwrap().get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return ResponseTemplate::new(404);
            }
        }
        if self.malformed.contains(&key) {
            return ResponseTemplate::new(200).set_body_string(r#"{"invalid": "data"}"#);
        }
        match self.fragments.get(&key) {
            Some(fragment) => ResponseTemplate::new(200).set_body_json(fragment),
            None => ResponseTemplate::new(404),
        }
    }
}
