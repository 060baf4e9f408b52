//! The declarative generator fleet.
//!
//! Each entry names the binary and its tool templates; nothing else varies
//! between generators. Tools that shell out to long-running dev servers are
//! deliberately absent, every template terminates on its own.

use crate::command::CommandAdapter;

/// All generators the gateway knows out of the box.
pub fn builtin_adapters() -> Vec<CommandAdapter> {
    vec![
        CommandAdapter::new("hugo", "hugo")
            .with_language("Go")
            .with_description("Hugo static site generator")
            .with_tool("version", "print the hugo version", vec!["version"])
            .with_open_tool("build", "build the site", vec![])
            .with_open_tool("new", "create new content", vec!["new"]),
        CommandAdapter::new("jekyll", "jekyll")
            .with_language("Ruby")
            .with_description("Jekyll static site generator")
            .with_tool("version", "print the jekyll version", vec!["--version"])
            .with_open_tool("build", "build the site", vec!["build"])
            .with_open_tool("doctor", "diagnose site problems", vec!["doctor"]),
        CommandAdapter::new("eleventy", "npx")
            .with_language("JavaScript")
            .with_description("Eleventy (11ty) static site generator")
            .with_tool("version", "print the eleventy version", vec!["@11ty/eleventy", "--version"])
            .with_open_tool("build", "build the site", vec!["@11ty/eleventy"]),
        CommandAdapter::new("zola", "zola")
            .with_language("Rust")
            .with_description("Zola static site generator")
            .with_tool("version", "print the zola version", vec!["--version"])
            .with_open_tool("build", "build the site", vec!["build"])
            .with_open_tool("check", "check site content and links", vec!["check"]),
        CommandAdapter::new("hexo", "npx")
            .with_language("JavaScript")
            .with_description("Hexo static site generator")
            .with_tool("version", "print the hexo version", vec!["hexo", "version"])
            .with_open_tool("build", "generate the site", vec!["hexo", "generate"])
            .with_open_tool("clean", "remove generated files", vec!["hexo", "clean"]),
        CommandAdapter::new("gatsby", "npx")
            .with_language("JavaScript")
            .with_description("Gatsby static site framework")
            .with_tool("version", "print the gatsby version", vec!["gatsby", "--version"])
            .with_open_tool("build", "build the site", vec!["gatsby", "build"])
            .with_open_tool("clean", "wipe the local cache", vec!["gatsby", "clean"]),
        CommandAdapter::new("astro", "npx")
            .with_language("JavaScript")
            .with_description("Astro web framework")
            .with_tool("version", "print the astro version", vec!["astro", "--version"])
            .with_open_tool("build", "build the site", vec!["astro", "build"])
            .with_open_tool("check", "type-check the project", vec!["astro", "check"]),
        CommandAdapter::new("mkdocs", "mkdocs")
            .with_language("Python")
            .with_description("MkDocs documentation generator")
            .with_tool("version", "print the mkdocs version", vec!["--version"])
            .with_open_tool("build", "build the documentation", vec!["build"]),
        CommandAdapter::new("sphinx", "sphinx-build")
            .with_language("Python")
            .with_description("Sphinx documentation generator")
            .with_tool("version", "print the sphinx version", vec!["--version"])
            .with_open_tool("build", "build the documentation", vec!["-b", "html"]),
        CommandAdapter::new("pelican", "pelican")
            .with_language("Python")
            .with_description("Pelican static site generator")
            .with_tool("version", "print the pelican version", vec!["--version"])
            .with_open_tool("build", "generate the site", vec![]),
        CommandAdapter::new("middleman", "middleman")
            .with_language("Ruby")
            .with_description("Middleman static site generator")
            .with_tool("version", "print the middleman version", vec!["version"])
            .with_open_tool("build", "build the site", vec!["build"]),
        CommandAdapter::new("docusaurus", "npx")
            .with_language("JavaScript")
            .with_description("Docusaurus documentation site generator")
            .with_open_tool("build", "build the site", vec!["docusaurus", "build"])
            .with_open_tool("clear", "remove generated assets and caches", vec!["docusaurus", "clear"]),
        CommandAdapter::new("nikola", "nikola")
            .with_language("Python")
            .with_description("Nikola static site generator")
            .with_tool("version", "print the nikola version", vec!["version"])
            .with_open_tool("build", "build the site", vec!["build"])
            .with_open_tool("check", "check generated links and files", vec!["check", "-l"]),
        CommandAdapter::new("vitepress", "npx")
            .with_language("JavaScript")
            .with_description("VitePress documentation site generator")
            .with_tool("version", "print the vitepress version", vec!["vitepress", "--version"])
            .with_open_tool("build", "build the site", vec!["vitepress", "build"]),
        CommandAdapter::new("bridgetown", "bridgetown")
            .with_language("Ruby")
            .with_description("Bridgetown static site framework")
            .with_tool("version", "print the bridgetown version", vec!["--version"])
            .with_open_tool("build", "build the site", vec!["build"]),
        CommandAdapter::new("cobalt", "cobalt")
            .with_language("Rust")
            .with_description("Cobalt static site generator")
            .with_tool("version", "print the cobalt version", vec!["--version"])
            .with_open_tool("build", "build the site", vec!["build"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SsgAdapter as _;
    use std::collections::HashSet;

    #[test]
    fn adapter_names_are_unique() {
        let adapters = builtin_adapters();
        let names: HashSet<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(names.len(), adapters.len());
    }

    #[test]
    fn every_adapter_declares_language_and_tools() {
        for adapter in builtin_adapters() {
            assert!(!adapter.language().is_empty(), "{}", adapter.name());
            assert!(!adapter.description().is_empty(), "{}", adapter.name());
            assert!(!adapter.tools().is_empty(), "{}", adapter.name());
        }
    }

    #[test]
    fn tool_names_are_unique_within_each_adapter() {
        for adapter in builtin_adapters() {
            let tools = adapter.tools();
            let names: HashSet<String> = tools.iter().map(|t| t.name.clone()).collect();
            assert_eq!(names.len(), tools.len(), "{}", adapter.name());
        }
    }
}
