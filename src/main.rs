#[tokio::main]
async fn main() -> std::io::Result<()> {
    lander_server::frameworks::server::run_with_config().await
}
