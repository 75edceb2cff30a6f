fn main() {
    if let Err(e) = bracket_engine::run() {
        eprintln!("bracket-engine: {e}");
        std::process::exit(1);
    }
}
