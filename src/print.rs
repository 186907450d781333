use serde::Serialize;
use vitrine::application::{error::AppError, images::DecodedImage, session::ImageResult};
use vitrine_api_types::Product;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string(value)
        .map_err(|e| AppError::unexpected(format!("failed to render output: {e}")))?;
    println!("{out}");
    Ok(())
}

pub fn product_row(index: usize, product: &Product) {
    println!(
        "{index:>4}  {:<40}  {:>9.2}  {:>5} in stock  {:.1}★ ({})",
        truncate(&product.title, 40),
        product.price,
        product.stock,
        product.rating.rate,
        product.rating.count,
    );
}

pub fn image_row(address: &str, result: &ImageResult) {
    match result {
        Ok(image) => println!("{address}  {}", dimensions(image)),
        Err(err) => println!("{address}  error: {err}"),
    }
}

pub fn product_detail(product: &Product, image: Option<&ImageResult>) {
    for line in detail_lines(product) {
        println!("{line}");
    }
    if let Some(result) = image {
        image_row(&product.image, result);
    }
}

fn detail_lines(product: &Product) -> Vec<String> {
    let mut lines = vec![
        product.title.clone(),
        format!("{} · {}", product.brand, product.category),
        format!(
            "{:.2}  {} in stock  {:.1}★ ({})",
            product.price, product.stock, product.rating.rate, product.rating.count
        ),
    ];
    if !product.description.trim().is_empty() {
        lines.push(product.description.trim().to_string());
    }
    for (label, value) in product.specs.entries() {
        lines.push(format!("  {label:<12}{value}"));
    }
    lines
}

fn dimensions(image: &DecodedImage) -> String {
    format!(
        "{}  {}x{}  {} bytes",
        image.format,
        image.width,
        image.height,
        image.bytes.len()
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
