fn main() -> Result<(), Box<dyn std::error::Error>> {
    moodchat::cli::main()
}
