mod runtime;

fn main() {
    if let Err(error) = runtime::app::run_from_args() {
        eprintln!("vecu startup failed: {error}");
        std::process::exit(1);
    }
}
