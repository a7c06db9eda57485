#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = canvas_grader::run().await {
        eprintln!("canvas-grader fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
