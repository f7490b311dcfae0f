#[test]
fn check_readme_contains_quickstart_toml() -> anyhow::Result<()> {
    let readme = std::fs::read_to_string("README.md")?;
    let mut quickstart_toml = std::fs::read_to_string("demos/quickstart/oksconf.toml")?;
    quickstart_toml.insert_str(0, "```toml\n");
    quickstart_toml.push_str("```\n");
    assert!(
        readme.contains(&quickstart_toml),
        "README.md does not contain:\n{quickstart_toml}"
    );
    Ok(())
}

#[test]
fn check_quickstart_files_parse() -> anyhow::Result<()> {
    for entry in std::fs::read_dir("demos/quickstart")?
        .chain(std::fs::read_dir("demos/quickstart/schema")?)
    {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "oks") {
            let text = std::fs::read_to_string(&path)?;
            oksconf_dal::parse_file(&text)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        }
    }
    Ok(())
}
