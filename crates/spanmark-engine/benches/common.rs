// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with **bold**, _italic_ and `code`.\n\n* Bullet point\n* Another item\n1. Numbered\n\n> A quote\n\nSee [the docs](docs/index.md) for more.\n\n```\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_image_heavy(images: usize) -> String {
    let mut content = String::from("# Gallery\n\n");
    for i in 0..images {
        content.push_str(&format!("Image {i}: ![picture](http://example.com/{i}.png)\n"));
    }
    content
}
