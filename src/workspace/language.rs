//! Language tags for files, derived from extension or well-known filename.

use std::path::Path;

/// Tag a path with a language identifier, if one is known.
///
/// Well-known filenames win over extensions (`Package.swift` is a manifest,
/// `Dockerfile` has no extension at all).
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_string_lossy();
    if let Some(lang) = language_for_filename(&name) {
        return Some(lang);
    }
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    language_for_extension(&ext)
}

/// Map a lowercase file extension to a language identifier.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "swift" => "swift",
        "m" | "mm" => "objectivec",
        "h" | "c" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "rs" => "rust",
        "go" => "go",
        "py" | "pyi" => "python",
        "rb" => "ruby",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "jsx" | "tsx" => "react",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "cs" => "csharp",
        "php" => "php",
        "lua" => "lua",
        "dart" => "dart",
        "ex" | "exs" => "elixir",
        "hs" => "haskell",
        "sh" | "bash" | "zsh" | "fish" => "shell",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" | "less" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" | "plist" | "xib" | "storyboard" => "xml",
        "sql" => "sql",
        "md" | "markdown" => "markdown",
        "txt" => "text",
        "proto" => "protobuf",
        "graphql" | "gql" => "graphql",
        _ => return None,
    };
    Some(lang)
}

/// Map an exact filename to a language identifier.
pub fn language_for_filename(name: &str) -> Option<&'static str> {
    let lang = match name {
        "Package.swift" => "swift",
        "Makefile" | "makefile" | "GNUmakefile" => "make",
        "CMakeLists.txt" => "cmake",
        "Dockerfile" | "Containerfile" => "docker",
        "Gemfile" | "Rakefile" | "Podfile" | "Fastfile" => "ruby",
        "Cargo.toml" => "toml",
        ".gitignore" | ".gitattributes" => "git",
        _ => return None,
    };
    Some(lang)
}
