fn main() {
    if let Err(err) = csv_lint_infer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
