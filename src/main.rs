#[tokio::main]
async fn main() {
    std::process::exit(console_pilot::cli::run().await)
}
