fn main() {
    if let Err(err) = tabquery::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
