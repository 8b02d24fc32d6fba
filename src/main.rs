fn main() {
    if let Err(err) = sql_import::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
