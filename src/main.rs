#[tokio::main]
async fn main() {
    if let Err(e) = medthread_lib::run().await {
        eprintln!("medthread: {e}");
        std::process::exit(1);
    }
}
