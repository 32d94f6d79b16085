#[tokio::main]
async fn main() -> anyhow::Result<()> {
    frontpage_editor_lib::run().await
}
