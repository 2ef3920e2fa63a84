use std::fs::File;
use std::io::Write;

use chrono::Utc;

use pressmark::frontmatter::{serialize_frontmatter, FrontmatterSource};
use pressmark::slug::slug_from_text;

use crate::{NewPostArgs, PostOutput};

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|list| {
        list.split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn render_document(args: &NewPostArgs) -> String {
    let tags = split_tags(args.tags.as_deref());
    let slug = slug_from_text(&args.title);

    let source = FrontmatterSource {
        title: &args.title,
        created_at: Utc::now().date_naive(),
        category: args.category.as_deref(),
        tags: &tags,
        excerpt: None,
        published: false,
        featured: false,
        slug: &slug,
    };

    let mut buf = serialize_frontmatter(&source);
    buf.push('\n');
    buf.push_str("This is a body example\n");
    buf.push_str("Please remove it and replace with your content\n");
    buf
}

pub fn new_post_cmd(args: NewPostArgs) {
    let slug = slug_from_text(&args.title);
    if slug.is_empty() {
        eprintln!("Could not derive a file name from the title");
        return;
    }

    let document = render_document(&args);

    match args.output {
        PostOutput::Stdout => println!("{}", document),
        PostOutput::File => {
            let file_name = format!("{}.md", slug);
            println!("Creating file {}", file_name);
            let mut file = File::create(&file_name).unwrap();
            file.write_all(document.as_bytes()).unwrap();
        }
    };
}
