#[cfg(test)]
pub const FULL_DOC: &str = r#"---
title: "Your Post Title"
date: "2024-01-15"
category: "AI Technology"
tags: ["AI", "Machine Learning"]
excerpt: "A brief description"
published: true
featured: false
slug: "custom-slug-optional"
---

Body content..."#;

#[cfg(test)]
pub const NO_FRONTMATTER_DOC: &str = r#"# My post

Just a markdown document, with no metadata block at all.

Second paragraph.
"#;
