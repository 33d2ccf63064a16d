fn main() {
    if let Err(e) = pubtables::app::run_cli() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
