//! # チェック付き整数演算
//!
//! エンクレーブ境界でのサイズ計算に使用するオーバーフロー安全な加算・減算・乗算。
//! ホスト由来の値がエンクレーブ側のメモリ確保や制御フローに影響する前に、
//! ここを経由して表現可能性を検証する。
//!
//! ## 対応型
//! | 種別 | 型 |
//! |------|----|
//! | 符号なし | `u8`, `u16`, `u32`, `u64`, `usize` |
//! | 符号付き | `i8`, `i16`, `i32`, `i64` |
//!
//! ## 検出規則
//! 全ての演算は結果を計算する前に境界チェックを行う。ネイティブの
//! ラップアラウンドやパニックは発生しない。結果が型の範囲
//! `[MIN_LIMIT, MAX_LIMIT]` に収まらない場合は [`Overflow`] を返し、値は返さない。

/// 演算結果が型で表現できないことを示すエラー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("整数オーバーフロー")]
pub struct Overflow;

/// チェック付き演算の結果。`Err` の場合、呼び出し側が参照できる値は存在しない。
pub type CheckedResult<T> = Result<T, Overflow>;

/// オーバーフロー検出付き算術演算のトレイト。
pub trait SafeMath: Sized + Copy + PartialOrd {
    /// 表現可能な最小値
    const MIN_LIMIT: Self;
    /// 表現可能な最大値
    const MAX_LIMIT: Self;

    /// `self + rhs` を計算する。
    fn safe_add(self, rhs: Self) -> CheckedResult<Self>;

    /// `self - rhs` を計算する。
    fn safe_sub(self, rhs: Self) -> CheckedResult<Self>;

    /// `self * rhs` を計算する。
    fn safe_mul(self, rhs: Self) -> CheckedResult<Self>;
}

// ---------------------------------------------------------------------------
// 符号なし整数
// ---------------------------------------------------------------------------

macro_rules! impl_unsigned {
    ($($t:ty),* $(,)?) => {$(
        impl SafeMath for $t {
            const MIN_LIMIT: Self = <$t>::MIN;
            const MAX_LIMIT: Self = <$t>::MAX;

            #[inline]
            fn safe_add(self, rhs: Self) -> CheckedResult<Self> {
                // a + b > MAX  <=>  a > MAX - b
                if self > Self::MAX_LIMIT - rhs {
                    return Err(Overflow);
                }
                Ok(self + rhs)
            }

            #[inline]
            fn safe_sub(self, rhs: Self) -> CheckedResult<Self> {
                if self < rhs {
                    return Err(Overflow);
                }
                Ok(self - rhs)
            }

            #[inline]
            fn safe_mul(self, rhs: Self) -> CheckedResult<Self> {
                if self != 0 && rhs > Self::MAX_LIMIT / self {
                    return Err(Overflow);
                }
                Ok(self * rhs)
            }
        }
    )*};
}

impl_unsigned!(u8, u16, u32, u64, usize);

// ---------------------------------------------------------------------------
// 符号付き整数（2の補数）
// ---------------------------------------------------------------------------

macro_rules! impl_signed {
    ($($t:ty),* $(,)?) => {$(
        impl SafeMath for $t {
            const MIN_LIMIT: Self = <$t>::MIN;
            const MAX_LIMIT: Self = <$t>::MAX;

            #[inline]
            fn safe_add(self, rhs: Self) -> CheckedResult<Self> {
                // 同符号の場合のみオーバーフローし得る
                if (rhs > 0 && self > Self::MAX_LIMIT - rhs)
                    || (rhs < 0 && self < Self::MIN_LIMIT - rhs)
                {
                    return Err(Overflow);
                }
                Ok(self + rhs)
            }

            #[inline]
            fn safe_sub(self, rhs: Self) -> CheckedResult<Self> {
                // rhs < 0: MAX + rhs は常に表現可能
                // rhs > 0: MIN + rhs は常に表現可能
                if (rhs < 0 && self > Self::MAX_LIMIT + rhs)
                    || (rhs > 0 && self < Self::MIN_LIMIT + rhs)
                {
                    return Err(Overflow);
                }
                Ok(self - rhs)
            }

            #[inline]
            fn safe_mul(self, rhs: Self) -> CheckedResult<Self> {
                if self == 0 || rhs == 0 {
                    return Ok(0);
                }
                // 除算の被除数は常にMAXまたはMIN、除数の符号を固定しているため
                // MIN / -1 は発生しない。
                let overflow = if self > 0 {
                    if rhs > 0 {
                        self > Self::MAX_LIMIT / rhs
                    } else {
                        rhs < Self::MIN_LIMIT / self
                    }
                } else if rhs > 0 {
                    self < Self::MIN_LIMIT / rhs
                } else {
                    // 両方負: MIN × -1 はここで検出される
                    self < Self::MAX_LIMIT / rhs
                };
                if overflow {
                    return Err(Overflow);
                }
                Ok(self * rhs)
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64);

// ---------------------------------------------------------------------------
// 汎用関数
// ---------------------------------------------------------------------------

/// `a + b` をオーバーフロー検出付きで計算する。
#[inline]
pub fn safe_add<T: SafeMath>(a: T, b: T) -> CheckedResult<T> {
    a.safe_add(b)
}

/// `a - b` をオーバーフロー検出付きで計算する。
#[inline]
pub fn safe_sub<T: SafeMath>(a: T, b: T) -> CheckedResult<T> {
    a.safe_sub(b)
}

/// `a * b` をオーバーフロー検出付きで計算する。
#[inline]
pub fn safe_mul<T: SafeMath>(a: T, b: T) -> CheckedResult<T> {
    a.safe_mul(b)
}

/// ホスト由来の `u64` サイズを `usize` に変換する。
/// 32bitターゲットで切り詰めが起きる場合は [`Overflow`]。
#[inline]
pub fn safe_cast_u64_to_usize(value: u64) -> CheckedResult<usize> {
    usize::try_from(value).map_err(|_| Overflow)
}

/// 複数の `usize` を順に加算する。途中で一度でも溢れたら [`Overflow`]。
pub fn safe_sum_usize(values: &[usize]) -> CheckedResult<usize> {
    values.iter().try_fold(0usize, |acc, &v| acc.safe_add(v))
}
