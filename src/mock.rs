use axum::Router;

/// Serve `app` on an ephemeral local port, returning its base url.
pub async fn serve(app: Router) -> String {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  let server = axum::Server::from_tcp(listener)
    .unwrap()
    .serve(app.into_make_service());

  tokio::spawn(server);
  format!("http://{addr}")
}
