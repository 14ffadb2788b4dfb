fn main() {
    if let Err(err) = doomshield_lib::run() {
        eprintln!("doomshield: {err:?}");
        std::process::exit(1);
    }
}
