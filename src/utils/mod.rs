/// 工具模块
/// Utility modules
pub mod yuv;

/// Local timestamp used to name per-run artifacts, e.g. `2026_10_18_21_04_33`.
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_time_string() {
        let s = gen_time_string("_");
        assert_eq!(s.split('_').count(), 6);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c == '_'));
    }
}
