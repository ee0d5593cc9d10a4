//! In-process mock registry endpoint for tests: canned responses per path,
//! with every served request recorded.

use crate::config::RegistryEndpoint;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

pub(crate) struct MockRegistry {
    base_url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
}

struct MockState {
    responses: HashMap<String, (StatusCode, String)>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockRegistry {
    pub async fn spawn(responses: Vec<(&str, StatusCode, &str)>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(MockState {
            responses: responses
                .into_iter()
                .map(|(path, status, body)| (path.to_string(), (status, body.to_string())))
                .collect(),
            requests: requests.clone(),
        });

        let app = Router::new().fallback(handler).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockRegistry {
            base_url: Url::parse(&format!("http://{addr}/eureka/")).unwrap(),
            requests,
        }
    }

    pub fn endpoint(&self) -> RegistryEndpoint {
        RegistryEndpoint::new(self.base_url.clone())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

async fn handler(State(state): State<Arc<MockState>>, request: Request) -> (StatusCode, String) {
    let headers = request.headers();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let path = request.uri().path().to_string();

    state.requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        accept: header("accept"),
        content_type: header("content-type"),
        authorization: header("authorization"),
    });

    match state.responses.get(&path) {
        Some((status, body)) => (*status, body.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
