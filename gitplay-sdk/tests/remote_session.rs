use gitplay_core::{Backend, Error, History, MemoryBackend, Session};
use gitplay_sdk::HttpBackend;
use gitplay_server::GitplayServer;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn start_server(history: &History) -> String {
    let backend = MemoryBackend::new().with_repository("demo", history);
    let server = GitplayServer::new(Arc::new(backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_on(listener));
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_invalid_path_maps_to_path_invalid() {
    let url = start_server(&History::synthetic(3)).await;
    let backend = HttpBackend::new(url);
    assert!(backend.health_check().await.unwrap());

    let err = backend.open("nowhere").await.unwrap_err();
    assert_eq!(err, Error::PathInvalid("no repository at nowhere".to_string()));
}

#[tokio::test]
async fn test_session_over_http() {
    let history = History::synthetic(150).commit("Add notes", [("docs/notes.md", "a\nb\nc\n")]);
    let url = start_server(&history).await;
    let session = Session::with_defaults(Arc::new(HttpBackend::new(url)));

    assert_eq!(session.open_repository("demo").await.unwrap(), 151);
    assert_eq!(session.message_at(0).as_str(), "Initial commit");
    assert!(session.message_at(150).is_loading());

    session.ensure_loaded(150).await.unwrap();
    assert_eq!(session.message_at(150).as_str(), "Add notes");

    let index = session.jump_to(150).await.unwrap();
    assert_eq!(index, 150);
    let details = session.current_details().unwrap();
    let notes = details
        .file_tree
        .as_ref()
        .and_then(|tree| tree.find("docs/notes.md"))
        .cloned()
        .unwrap();

    session
        .open_file("docs/notes.md", &notes.object_id)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(session.lines(&notes.object_id).unwrap().len(), 3);

    let missing = session.open_file("ghost.txt", "0000").unwrap().await;
    assert!(matches!(missing, Err(Error::Fetch { .. })));
}
