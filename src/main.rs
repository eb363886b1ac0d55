fn main() {
    if let Err(err) = gsn_diagram::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
