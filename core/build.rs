use std::collections::HashSet;
use std::env;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const GLYPH_SIZE: usize = 7;

#[derive(Deserialize)]
struct LayoutFile {
    word: Option<String>,
    glyphs: Vec<GlyphEntry>,
}

#[derive(Deserialize)]
struct GlyphEntry {
    glyph: String,
    rows: Vec<String>,
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("missing CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir.parent().unwrap_or(&manifest_dir);
    let env_path = workspace_root.join(".env");
    let env_local_path = workspace_root.join(".env.local");

    let _ = dotenvy::from_filename(&env_local_path);
    let _ = dotenvy::from_filename(&env_path);

    println!("cargo:rerun-if-env-changed=GLYPH_LAYOUT_PATH");
    println!("cargo:rerun-if-changed={}", env_path.display());
    println!("cargo:rerun-if-changed={}", env_local_path.display());

    let layout_path = resolve_layout_path(workspace_root);
    println!("cargo:rerun-if-changed={}", layout_path.display());

    let contents = fs::read_to_string(&layout_path).unwrap_or_else(|err| {
        panic!(
            "failed to read glyph layout at {}: {err}",
            layout_path.display()
        )
    });

    let layout: LayoutFile = toml::from_str(&contents).unwrap_or_else(|err| {
        panic!(
            "failed to parse glyph layout at {}: {err}",
            layout_path.display()
        )
    });

    if layout.glyphs.is_empty() {
        panic!("glyph layout {} has no entries", layout_path.display());
    }

    let glyphs = validate_entries(&layout.glyphs, &layout_path);
    let spelled: String = glyphs.iter().map(|(glyph, _)| *glyph).collect();
    if let Some(word) = layout.word.as_deref() {
        if word != spelled {
            panic!(
                "word '{}' does not match glyph order '{}' in {}",
                word,
                spelled,
                layout_path.display()
            );
        }
    }

    let mut output = String::new();
    writeln!(&mut output, "pub const LAYOUT_WORD: &str = {:?};", spelled).unwrap();
    writeln!(&mut output).unwrap();
    writeln!(&mut output, "pub const GLYPH_LAYOUT: &[GlyphPattern] = &[").unwrap();
    for (glyph, cells) in &glyphs {
        writeln!(&mut output, "    GlyphPattern {{").unwrap();
        writeln!(&mut output, "        glyph: {:?},", glyph).unwrap();
        writeln!(&mut output, "        cells: [").unwrap();
        for row in cells {
            let row_text: Vec<&str> = row
                .iter()
                .map(|active| if *active { "true" } else { "false" })
                .collect();
            writeln!(&mut output, "            [{}],", row_text.join(", ")).unwrap();
        }
        writeln!(&mut output, "        ],").unwrap();
        writeln!(&mut output, "    }},").unwrap();
    }
    writeln!(&mut output, "];").unwrap();

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("missing OUT_DIR"));
    let out_path = out_dir.join("glyph_layout.rs");
    fs::write(&out_path, output).unwrap_or_else(|err| {
        panic!("failed to write {}: {err}", out_path.display())
    });
}

fn resolve_layout_path(workspace_root: &Path) -> PathBuf {
    let env_value = env::var("GLYPH_LAYOUT_PATH").ok();
    let raw_path = match env_value {
        Some(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => workspace_root.join("glyphs/monad.toml"),
    };
    if raw_path.is_relative() {
        workspace_root.join(raw_path)
    } else {
        raw_path
    }
}

fn validate_entries(
    entries: &[GlyphEntry],
    layout_path: &Path,
) -> Vec<(char, [[bool; GLYPH_SIZE]; GLYPH_SIZE])> {
    let mut seen = HashSet::new();
    let mut glyphs = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut chars = entry.glyph.chars();
        let glyph = match (chars.next(), chars.next()) {
            (Some(ch), None) if !ch.is_whitespace() && ch != '-' => ch,
            _ => panic!(
                "glyph '{}' must be a single non-space character other than '-' in {}",
                entry.glyph,
                layout_path.display()
            ),
        };
        if !seen.insert(glyph) {
            panic!("duplicate glyph '{}' in {}", glyph, layout_path.display());
        }
        if entry.rows.len() != GLYPH_SIZE {
            panic!(
                "glyph '{}' has {} rows, expected {} in {}",
                glyph,
                entry.rows.len(),
                GLYPH_SIZE,
                layout_path.display()
            );
        }

        let mut cells = [[false; GLYPH_SIZE]; GLYPH_SIZE];
        let mut active = 0usize;
        for (row_idx, row) in entry.rows.iter().enumerate() {
            let row_chars: Vec<char> = row.chars().collect();
            if row_chars.len() != GLYPH_SIZE {
                panic!(
                    "glyph '{}' row {} has {} cells, expected {} in {}",
                    glyph,
                    row_idx,
                    row_chars.len(),
                    GLYPH_SIZE,
                    layout_path.display()
                );
            }
            for (col_idx, cell) in row_chars.iter().enumerate() {
                cells[row_idx][col_idx] = match cell {
                    '#' => {
                        active += 1;
                        true
                    }
                    '.' => false,
                    other => panic!(
                        "glyph '{}' row {} has invalid cell '{}' in {}",
                        glyph,
                        row_idx,
                        other,
                        layout_path.display()
                    ),
                };
            }
        }
        if active == 0 {
            panic!(
                "glyph '{}' has no active cells in {}",
                glyph,
                layout_path.display()
            );
        }
        glyphs.push((glyph, cells));
    }

    glyphs
}
