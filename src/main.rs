#[tokio::main]
async fn main() {
    if let Err(e) = vocab_lens::run().await {
        eprintln!("vocab-lens: {e}");
        std::process::exit(1);
    }
}
