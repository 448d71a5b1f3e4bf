// src/bin/test_synthetic.rs
//
// Prints the same synthetic batch twice; the two blocks must be identical.
use agri_price_engine::services::synthetic::generate;

fn main() {
    for pass in 1..=2 {
        println!("--- pass {pass} ---");
        for rec in generate("Punjab", "Wheat", 5, None) {
            println!(
                "{:<30} {:>8.0} Rs/quintal  {:?} (change {})",
                rec.market, rec.price, rec.trend, rec.change
            );
        }
    }
}
