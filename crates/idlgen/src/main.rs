fn main() {
    std::process::exit(idlgen_cli::run(std::env::args().collect()));
}
