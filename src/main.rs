use eyre::Report;

#[tokio::main]
async fn main() -> Result<(), Report> {
    kolo::run().await
}
