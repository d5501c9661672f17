//! Classificateurs élémentaires : primalité, quadrant de grille, tranche de somme.

pub const QUADRANT_LABELS: [&str; 4] = ["Haut gauche", "Haut droite", "Bas gauche", "Bas droite"];

pub fn is_prime(n: u32) -> bool {
    if n <= 1 {
        return false;
    }
    let mut d = 2u32;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Grille canonique de 10 colonnes : lignes 1-3 en haut, colonnes 1-5 à gauche.
pub fn quadrant_of(n: u8) -> usize {
    let n = n as u32;
    let row = n.div_ceil(10);
    let col = if n % 10 == 0 { 10 } else { n % 10 };
    match (row <= 3, col <= 5) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

/// Index de la première borne >= somme, sinon la tranche "au-delà".
pub fn sum_bucket_of(sum: u32, bounds: &[u32]) -> usize {
    bounds
        .iter()
        .position(|&upper| sum <= upper)
        .unwrap_or(bounds.len())
}

pub fn sum_bucket_labels(bounds: &[u32]) -> Vec<String> {
    let mut labels = Vec::with_capacity(bounds.len() + 1);
    let mut lower = 0u32;
    for &upper in bounds {
        labels.push(format!("{}-{}", lower, upper));
        lower = upper + 1;
    }
    labels.push(format!("{}+", lower));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        let primes: Vec<u32> = (0..=30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(!is_prime(49));
        assert!(is_prime(59));
    }

    #[test]
    fn test_quadrant_corners() {
        assert_eq!(quadrant_of(1), 0);
        assert_eq!(quadrant_of(5), 0);
        assert_eq!(quadrant_of(6), 1);
        assert_eq!(quadrant_of(10), 1);
        assert_eq!(quadrant_of(30), 1);
        assert_eq!(quadrant_of(25), 0);
        assert_eq!(quadrant_of(31), 2);
        assert_eq!(quadrant_of(45), 2);
        assert_eq!(quadrant_of(40), 3);
        assert_eq!(quadrant_of(58), 3);
        assert_eq!(quadrant_of(60), 3);
    }

    #[test]
    fn test_quadrants_balanced_on_sixty() {
        let mut counts = [0u32; 4];
        for n in 1..=60u8 {
            counts[quadrant_of(n)] += 1;
        }
        assert_eq!(counts, [15, 15, 15, 15]);
    }

    #[test]
    fn test_sum_bucket_of() {
        let bounds = [50, 100, 150, 200, 250];
        assert_eq!(sum_bucket_of(0, &bounds), 0);
        assert_eq!(sum_bucket_of(50, &bounds), 0);
        assert_eq!(sum_bucket_of(51, &bounds), 1);
        assert_eq!(sum_bucket_of(171, &bounds), 3);
        assert_eq!(sum_bucket_of(250, &bounds), 4);
        assert_eq!(sum_bucket_of(251, &bounds), 5);
        assert_eq!(sum_bucket_of(999, &bounds), 5);
    }

    #[test]
    fn test_sum_bucket_labels() {
        assert_eq!(
            sum_bucket_labels(&[50, 100, 150, 200, 250]),
            vec!["0-50", "51-100", "101-150", "151-200", "201-250", "251+"]
        );
        assert_eq!(sum_bucket_labels(&[]), vec!["0+"]);
    }
}
