#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stepwright::cli::run().await
}
