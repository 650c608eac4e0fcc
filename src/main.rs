fn main() -> anyhow::Result<()> {
    blogdesk::cli::run()
}
