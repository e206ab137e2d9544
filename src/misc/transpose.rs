/// Transpose a rectangular grid of values (rows become columns).
pub fn transpose_grid<P: Clone>(grid: &[Vec<P>]) -> Vec<Vec<P>> {
    let mut transposed = vec![vec![]; grid[0].len()];
    grid.iter().for_each(|row| {
        row.iter().enumerate().for_each(|(j, p)| {
            transposed[j].push(p.clone());
        })
    });
    transposed
}

#[cfg(test)]
mod tests {
    use super::transpose_grid;

    #[test]
    fn test_transpose_grid() {
        let grid = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let transposed = transpose_grid(&grid);
        assert_eq!(transposed, vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
        assert_eq!(transpose_grid(&transposed), grid);
    }
}
