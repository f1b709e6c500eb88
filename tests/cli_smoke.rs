use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_randomart")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "randomart.exe"
            } else {
                "randomart"
            });
            p
        })
}

#[test]
fn cli_render_writes_png_and_shader() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let out_path = dir.join("out.png");
    let shader_path = dir.join("out.wgsl");
    let _ = std::fs::remove_file(&out_path);
    let _ = std::fs::remove_file(&shader_path);

    let out_arg = out_path.to_string_lossy().to_string();
    let shader_arg = shader_path.to_string_lossy().to_string();

    let output = std::process::Command::new(exe())
        .args([
            "render", "--preset", "gradients", "--seed", "7", "--width", "32", "--height", "24",
            "--backend", "cpu", "--out",
        ])
        .arg(out_arg.as_str())
        .args(["--shader-out", shader_arg.as_str()])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let canonical = String::from_utf8(output.stdout).unwrap();
    assert!(canonical.trim().starts_with("triple("), "{canonical}");

    let img = image::open(&out_path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (32, 24));

    let shader = std::fs::read_to_string(&shader_path).unwrap();
    randomart::render::validate_wgsl(&shader).unwrap();
}

#[test]
fn cli_interpreted_render_matches_expr_output() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("interpreted.png");
    let _ = std::fs::remove_file(&out_path);

    let expr = std::process::Command::new(exe())
        .args(["expr", "--preset", "basic", "--seed", "11", "--depth", "4"])
        .output()
        .unwrap();
    assert!(expr.status.success());

    let render = std::process::Command::new(exe())
        .args([
            "render", "--preset", "basic", "--seed", "11", "--depth", "4", "--width", "16",
            "--height", "16", "--backend", "interpreted", "--out",
        ])
        .arg(out_path.to_string_lossy().as_ref())
        .output()
        .unwrap();
    assert!(render.status.success(), "{}", String::from_utf8_lossy(&render.stderr));
    assert_eq!(expr.stdout, render.stdout);
    assert!(out_path.exists());
}

#[test]
fn cli_reports_grammar_errors() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let grammar_path = dir.join("broken.grammar");
    std::fs::write(&grammar_path, "E :: x:1\nC x:1\n").unwrap();

    let output = std::process::Command::new(exe())
        .args(["expr", "--seed", "1", "--grammar"])
        .arg(grammar_path.to_string_lossy().as_ref())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "{stderr}");
}

#[test]
fn cli_lists_presets() {
    let output = std::process::Command::new(exe())
        .arg("presets")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for p in randomart::PRESETS {
        assert!(stdout.contains(p.name), "{stdout}");
    }
}
