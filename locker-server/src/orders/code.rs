//! 4 位取餐码生成
//!
//! 取餐码在所有未终结订单之间唯一。先随机尝试若干次，
//! 再从随机起点线性扫描整个码空间，码空间耗尽时返回 `None`。

use rand::Rng;

/// 码空间大小 (`0000` ..= `9999`)
pub const CODE_SPACE: u32 = 10_000;

const RANDOM_ATTEMPTS: usize = 32;

pub fn format_code(n: u32) -> String {
    format!("{:04}", n % CODE_SPACE)
}

/// Whether `code` has the pickup code shape (exactly four ASCII digits)
pub fn is_well_formed(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Pick a code not reported as taken by `is_taken`
pub fn generate_unique<R, E>(
    rng: &mut R,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<Option<String>, E>
where
    R: Rng,
{
    for _ in 0..RANDOM_ATTEMPTS {
        let code = format_code(rng.gen_range(0..CODE_SPACE));
        if !is_taken(&code)? {
            return Ok(Some(code));
        }
    }

    let start = rng.gen_range(0..CODE_SPACE);
    for offset in 0..CODE_SPACE {
        let code = format_code(start + offset);
        if !is_taken(&code)? {
            return Ok(Some(code));
        }
    }

    Ok(None)
}
