use std::borrow::Cow;

const RUST_HASH_LENGTH: usize = 17;

// Rust hashes are hex digits with an `h` prepended.
fn is_rust_hash(s: &str) -> bool {
    s.len() == RUST_HASH_LENGTH
        && s.starts_with('h')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Makes a function symbol readable.
///
/// Mangled Rust symbols like `_ZN3std2rt10lang_start17h0123456789abcdefE` and partially
/// demangled ones like `std::rt::lang_start::h0123456789abcdef` both become
/// `std::rt::lang_start`. Mangled C++ symbols like `_Z8allocatePKcm` become
/// `allocate(char const*, unsigned long)`. Everything else is returned unchanged.
pub(super) fn prettify(symbol: &str) -> Cow<'_, str> {
    if let Ok(demangled) = rustc_demangle::try_demangle(symbol) {
        return Cow::Owned(format!("{:#}", demangled));
    }
    if symbol.starts_with("_Z") {
        if let Some(demangled) = demangle_cpp(symbol) {
            return Cow::Owned(demangled);
        }
    }
    fix_partially_demangled_rust_symbol(symbol)
}

fn demangle_cpp(symbol: &str) -> Option<String> {
    let parsed = cpp_demangle::Symbol::new(symbol).ok()?;
    parsed.demangle(&cpp_demangle::DemangleOptions::default()).ok()
}

/// Demangles partially demangled Rust symbols.
///
/// For example:
///     `_$LT$grep_searcher..searcher..glue..ReadByLine$LT$$u27$s$C$$u20$M$C$$u20$R$C$$u20$S$GT$$GT$::run::h30ecedc997ad7e32`
/// becomes
///     `<grep_searcher::searcher::glue::ReadByLine<'s, M, R, S>>::run`
fn fix_partially_demangled_rust_symbol(symbol: &str) -> Cow<'_, str> {
    // If there's no trailing Rust hash just return the symbol as is.
    let rest = match symbol.rsplit_once("::") {
        Some((rest, hash)) if is_rust_hash(hash) => rest,
        _ => return Cow::Borrowed(symbol),
    };
    let mut rest = rest.strip_prefix("_$").map_or(rest, |_| &rest[1..]);

    let mut demangled = String::with_capacity(rest.len());
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("..") {
            demangled.push_str("::");
            rest = after;
        } else if let Some(after) = rest.strip_prefix('.') {
            demangled.push('.');
            rest = after;
        } else if rest.starts_with('$') {
            macro_rules! demangle {
                ($($pat:expr => $demangled:expr,)*) => ({
                    $(if let Some(after) = rest.strip_prefix($pat) {
                        demangled.push_str($demangled);
                        rest = after;
                    } else)*
                    {
                        demangled.push_str(rest);
                        break;
                    }
                })
            }

            demangle! {
                "$SP$" => "@",
                "$BP$" => "*",
                "$RF$" => "&",
                "$LT$" => "<",
                "$GT$" => ">",
                "$LP$" => "(",
                "$RP$" => ")",
                "$C$" => ",",
                "$u7e$" => "~",
                "$u20$" => " ",
                "$u27$" => "'",
                "$u3d$" => "=",
                "$u5b$" => "[",
                "$u5d$" => "]",
                "$u7b$" => "{",
                "$u7d$" => "}",
                "$u3b$" => ";",
                "$u2b$" => "+",
                "$u21$" => "!",
                "$u22$" => "\"",
            }
        } else {
            let idx = rest.find(|c: char| c == '$' || c == '.').unwrap_or(rest.len());
            demangled.push_str(&rest[..idx]);
            rest = &rest[idx..];
        }
    }

    Cow::Owned(demangled)
}
