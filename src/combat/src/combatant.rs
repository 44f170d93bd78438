// src/combat/src/combatant.rs

/// 表示可以参加战斗的活体
pub trait Combatant {
    /// 获取名称
    fn name(&self) -> &str;

    /// 获取当前生命值
    fn health(&self) -> f32;

    /// 获取攻击力
    fn attack(&self) -> f32;

    /// 设置当前生命值
    fn set_health(&mut self, health: f32);

    /// 标记死亡状态
    fn set_dead(&mut self, dead: bool);

    /// 是否已死亡
    fn is_dead(&self) -> bool;

    /// 造成伤害，返回是否仍然存活
    fn take_damage(&mut self, amount: f32) -> bool {
        self.set_health(self.health() - amount);
        if self.health() < 1.0 {
            self.set_dead(true);
        }
        !self.is_dead()
    }
}
