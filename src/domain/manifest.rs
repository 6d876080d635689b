//! Model Manifest - 模型清单解析
//!
//! 清单每行一条 shell 风格的下载指令，例如:
//! `wget -c https://host/model.safetensors -P ./models/checkpoints`

use std::path::{Path, PathBuf};

/// 指令关键字
const DIRECTIVE_KEYWORD: &str = "wget";

/// 一条有效的下载指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDirective {
    pub url: String,
    pub dest_dir: String,
    pub filename: String,
}

/// 单行解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    /// 注释、空行或其他命令
    Ignored,
    Directive(DownloadDirective),
    /// 以关键字开头但缺少 `-c <url>` 或 `-P <dir>`
    Malformed(String),
}

/// 解析一行清单
pub fn parse_line(line: &str) -> ManifestLine {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.first() != Some(&DIRECTIVE_KEYWORD) {
        return ManifestLine::Ignored;
    }

    let (Some(url), Some(dest_dir)) = (flag_value(&tokens, "-c"), flag_value(&tokens, "-P"))
    else {
        return ManifestLine::Malformed(trimmed.to_string());
    };

    match url_filename(url) {
        Some(filename) => ManifestLine::Directive(DownloadDirective {
            url: url.to_string(),
            dest_dir: dest_dir.to_string(),
            filename,
        }),
        None => ManifestLine::Malformed(trimmed.to_string()),
    }
}

/// 解析整个清单
pub fn parse_manifest(text: &str) -> Vec<ManifestLine> {
    text.lines()
        .map(parse_line)
        .filter(|l| *l != ManifestLine::Ignored)
        .collect()
}

fn flag_value<'a>(tokens: &[&'a str], flag: &str) -> Option<&'a str> {
    let pos = tokens.iter().position(|t| *t == flag)?;
    tokens
        .get(pos + 1)
        .copied()
        .filter(|v| !v.starts_with('-'))
}

/// URL 路径的最后一段（去掉 query / fragment）
fn url_filename(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() || !path.contains('/') {
        return None;
    }
    Some(name.to_string())
}

impl DownloadDirective {
    /// 目标目录
    ///
    /// 指向 `models` 子树且不在安装目录下的相对目录会拼接到安装目录。
    pub fn dest_dir(&self, install_dir: &Path) -> PathBuf {
        let stated = Path::new(&self.dest_dir);
        if self.dest_dir.contains("models") && !stated.starts_with(install_dir) {
            let relative = stated.strip_prefix("./").unwrap_or(stated);
            if relative.is_absolute() {
                return relative.to_path_buf();
            }
            return install_dir.join(relative);
        }
        stated.to_path_buf()
    }

    /// 完整目标文件路径
    pub fn dest_path(&self, install_dir: &Path) -> PathBuf {
        self.dest_dir(install_dir).join(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive() {
        let line = "wget -c https://example.com/sd/v1-5.safetensors -P ./models/checkpoints";
        match parse_line(line) {
            ManifestLine::Directive(d) => {
                assert_eq!(d.url, "https://example.com/sd/v1-5.safetensors");
                assert_eq!(d.dest_dir, "./models/checkpoints");
                assert_eq!(d.filename, "v1-5.safetensors");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let line = "  wget -P models/vae -c https://example.com/vae.pt?download=true  ";
        match parse_line(line) {
            ManifestLine::Directive(d) => {
                assert_eq!(d.filename, "vae.pt");
                assert_eq!(d.dest_dir, "models/vae");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_flags_are_malformed() {
        assert!(matches!(
            parse_line("wget https://example.com/a.bin"),
            ManifestLine::Malformed(_)
        ));
        assert!(matches!(
            parse_line("wget -c https://example.com/a.bin"),
            ManifestLine::Malformed(_)
        ));
        assert!(matches!(
            parse_line("wget -c -P ./models"),
            ManifestLine::Malformed(_)
        ));
    }

    #[test]
    fn test_non_directives_ignored() {
        assert_eq!(parse_line(""), ManifestLine::Ignored);
        assert_eq!(parse_line("# comment"), ManifestLine::Ignored);
        assert_eq!(parse_line("curl -c x -P y"), ManifestLine::Ignored);
    }

    #[test]
    fn test_parse_manifest_keeps_only_directive_lines() {
        let text = "# models\nwget -c https://e.com/a.bin -P ./models/a\n\nwget broken\n";
        let lines = parse_manifest(text);
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines[1], ManifestLine::Malformed(_)));
    }

    #[test]
    fn test_models_dir_joined_to_install_dir() {
        let install = Path::new("./ComfyUI");
        let d = DownloadDirective {
            url: "https://e.com/a.bin".into(),
            dest_dir: "./models/checkpoints".into(),
            filename: "a.bin".into(),
        };
        assert_eq!(
            d.dest_path(install),
            PathBuf::from("./ComfyUI/models/checkpoints/a.bin")
        );
    }

    #[test]
    fn test_dir_already_under_install_dir_kept() {
        let install = Path::new("./ComfyUI");
        let d = DownloadDirective {
            url: "https://e.com/a.bin".into(),
            dest_dir: "./ComfyUI/models/vae".into(),
            filename: "a.bin".into(),
        };
        assert_eq!(d.dest_dir(install), PathBuf::from("./ComfyUI/models/vae"));
    }

    #[test]
    fn test_non_models_dir_kept() {
        let install = Path::new("./ComfyUI");
        let d = DownloadDirective {
            url: "https://e.com/a.bin".into(),
            dest_dir: "/tmp/extra".into(),
            filename: "a.bin".into(),
        };
        assert_eq!(d.dest_dir(install), PathBuf::from("/tmp/extra"));
    }
}
