use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const API_KEY: &str = "test-pexels-key";

#[derive(Debug, Clone, Default)]
pub struct PexelsStubConfig {
    /// Queries containing this text get a 500.
    pub fail_when_query_contains: Option<String>,
}

pub struct PexelsStub {
    pub base_url: String,
    queries: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PexelsStub {
    pub fn spawn(config: PexelsStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start pexels stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let queries = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&queries);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = url::Url::parse(&format!("http://stub{}", request.url()))
                    .expect("parse request url");
                if request.method() != &tiny_http::Method::Get || url.path() != "/videos/search" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorized = request.headers().iter().any(|header| {
                    header.field.equiv("Authorization") && header.value.as_str() == API_KEY
                });
                if !authorized {
                    let _ = request.respond(
                        tiny_http::Response::from_string("unauthorized").with_status_code(401),
                    );
                    continue;
                }

                let query = url
                    .query_pairs()
                    .find(|(key, _)| key == "query")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                seen.lock().expect("lock seen queries").push(query.clone());

                if let Some(needle) = config.fail_when_query_contains.as_deref() {
                    if query.contains(needle) {
                        let _ = request.respond(
                            tiny_http::Response::from_string("upstream exploded")
                                .with_status_code(500),
                        );
                        continue;
                    }
                }

                let slug = query.replace(' ', "-");
                let body = serde_json::json!({
                    "page": 1,
                    "per_page": 5,
                    "videos": [
                        {
                            "id": 1,
                            "url": format!("https://www.pexels.com/video/{slug}-4821/"),
                            "duration": 12,
                            "user": { "name": "Stub Author" },
                            "video_files": [
                                { "link": format!("https://videos.pexels.com/{slug}.mp4") }
                            ]
                        }
                    ]
                });

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(body.to_string())
                    .with_status_code(200)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            queries,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Search terms received so far, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("lock seen queries").clone()
    }
}

impl Drop for PexelsStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
