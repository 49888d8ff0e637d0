mod cli;

#[tokio::main]
async fn main() {
    let code = match cli::run_from_args().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pairfetch error: {:#}", err);
            1
        }
    };
    // Exit from inside the runtime: a pending blocking stdin read would
    // otherwise keep runtime shutdown waiting.
    std::process::exit(code);
}
