use std::env;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("tunes.rs");

    let mut entries: Vec<(String, String)> = Vec::new();
    let tunes_dir = Path::new("tunes");

    if tunes_dir.exists() {
        for entry in WalkDir::new(tunes_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "abc"))
        {
            let path = entry.path();
            // Tune id is the file stem, matching how loose .abc files are named
            let id = path.file_stem().unwrap().to_string_lossy().to_string();
            if let Ok(content) = fs::read_to_string(path) {
                entries.push((id, content));
            }
        }
    }

    let mut code = String::new();
    code.push_str("/// Embedded tune files: (id, ABC source)\n");
    code.push_str("pub static TUNES: &[(&str, &str)] = &[\n");
    for (id, content) in &entries {
        code.push_str(&format!("    ({:?}, {:?}),\n", id, content));
    }
    code.push_str("];\n");

    fs::write(&dest_path, code).unwrap();

    println!("cargo:rerun-if-changed=tunes");
}
