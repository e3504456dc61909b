fn main() {
    if let Err(e) = resultview::app::run_cli() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
