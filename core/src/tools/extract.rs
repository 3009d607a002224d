use html_scraper::{ElementRef, Html, Selector};

const MAX_CANDIDATES: usize = 20_000;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "iframe", "svg",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub markdown: String,
    pub truncated: bool,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &ElementRef) -> bool {
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "nav", "menu", "sidebar", "footer", "header", "banner", "cookie", "consent", "advert",
        "promo", "subscribe", "newsletter",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

fn text_chars(el: &ElementRef) -> usize {
    el.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            let name = parent.value().name();
            (name != "script" && name != "style").then(|| text.trim().chars().count())
        })
        .sum()
}

fn link_text_chars(el: &ElementRef, links: &Selector) -> usize {
    el.select(links)
        .map(|a| a.text().map(|t| t.trim().chars().count()).sum::<usize>())
        .sum()
}

pub fn page_title(doc: &Html) -> Option<String> {
    let og = selector(r#"meta[property="og:title"]"#).and_then(|sel| {
        doc.select(&sel)
            .filter_map(|m| m.value().attr("content"))
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    });

    og.or_else(|| {
        let sel = selector("title")?;
        let title = doc.select(&sel).next()?.text().collect::<String>();
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        (!title.is_empty()).then_some(title)
    })
}

fn pick_main_node(doc: &Html) -> Option<(String, usize)> {
    let candidates = selector("article, main, section, div")?;
    let links = selector("a")?;

    let mut best: Option<(i64, String, usize)> = None;
    for el in doc.select(&candidates).take(MAX_CANDIDATES) {
        if is_boilerplate_container(&el) {
            continue;
        }
        let txt = text_chars(&el);
        if txt < 20 {
            continue;
        }
        let link_txt = link_text_chars(&el, &links);

        let mut score = txt as i64 - 2 * link_txt as i64;
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }

        if score > 0 && best.as_ref().is_none_or(|(s, _, _)| score > *s) {
            best = Some((score, el.html(), txt));
        }
    }

    if let Some((_, html, txt)) = best {
        return Some((html, txt));
    }

    let body = selector("body")?;
    let el = doc.select(&body).next()?;
    Some((el.html(), text_chars(&el)))
}

fn to_markdown(html: &str) -> Option<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    converter.convert(html).ok()
}

fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => (
            format!("{}\n\n... (content truncated)", &s[..idx]),
            true,
        ),
        None => (s.to_string(), false),
    }
}

/// Returns `None` when the page has less than `min_chars` of main text.
pub fn extract_article(html: &str, min_chars: usize, max_chars: usize) -> Option<Article> {
    let doc = Html::parse_document(html);
    let title = page_title(&doc).unwrap_or_default();

    let (main_html, main_chars) = pick_main_node(&doc)?;
    if main_chars < min_chars {
        return None;
    }

    let markdown = to_markdown(&main_html)?;
    let markdown = markdown.trim();
    if markdown.is_empty() {
        return None;
    }

    let (markdown, truncated) = truncate_chars(markdown, max_chars);
    Some(Article {
        title,
        markdown,
        truncated,
    })
}
