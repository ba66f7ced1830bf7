fn main() {
    if let Err(e) = scoreworld::run() {
        tracing::error!("Fatal: {:#}", e);
        eprintln!("scoreworld: {:#}", e);
        std::process::exit(1);
    }
}
