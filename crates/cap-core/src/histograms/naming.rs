/// Join the non-empty `parts` with `"_"`.
///
/// ```
/// use cap_core::make_name;
/// assert_eq!(make_name(&["PairHistos", "HP", "n1"]), "PairHistos_HP_n1");
/// assert_eq!(make_name(&["Global", "", "n"]), "Global_n");
/// ```
pub fn make_name(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// `base_i_suffix` for one index and `base_i1i2..._suffix` for more.
///
/// An empty `suffix` drops the trailing part.
///
/// ```
/// use cap_core::make_name_indexed;
/// assert_eq!(make_name_indexed("f1", &[2], "vsMult"), "f1_2_vsMult");
/// assert_eq!(make_name_indexed("f2", &[0, 1], ""), "f2_01");
/// ```
pub fn make_name_indexed(base: &str, indices: &[usize], suffix: &str) -> String {
    let index: String = indices.iter().map(|i| i.to_string()).collect();
    make_name(&[base, &index, suffix])
}

/// `base_filter_i1i2..._suffix`, used by groups which carry an event filter name.
pub fn make_name_with_filter(base: &str, filter: &str, indices: &[usize], suffix: &str) -> String {
    let index: String = indices.iter().map(|i| i.to_string()).collect();
    make_name(&[base, filter, &index, suffix])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_names() {
        assert_eq!(make_name_indexed("F2", &[1, 3], "vsMult"), "F2_13_vsMult");
        assert_eq!(make_name_indexed("f4", &[0, 0, 1, 2], ""), "f4_0012");
        assert_eq!(make_name_indexed("f1", &[7], ""), "f1_7");
        assert_eq!(
            make_name_with_filter("NuDyn", "All", &[0, 1], "vsCent"),
            "NuDyn_All_01_vsCent"
        );
    }
}
