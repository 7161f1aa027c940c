fn main() -> Result<(), Box<dyn std::error::Error>> {
    loaderscope_cli::run()
}
